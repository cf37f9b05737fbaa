//! Background chunk loading
//!
//! Fetching, decoding and static-layer rasterization run on a small worker
//! pool. Requests go out over one channel and finished chunks come back over
//! another; the frame loop drains completions without blocking. With zero
//! workers every request is served inline.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::streaming::chunk::{ChunkContents, ChunkContext};
use crate::streaming::source::ChunkSource;
use crate::streaming::window::ChunkCoord;
use crate::streaming::ChunkError;

/// Result of one chunk request
#[derive(Debug)]
pub enum LoadResult {
    /// Decoded and ready to attach
    Loaded(Box<ChunkContents>),
    /// Nothing stored for this cell
    Missing,
    /// Transient failure; the cell may be requested again later
    Failed(ChunkError),
}

/// Completion message
#[derive(Debug)]
pub struct LoadOutcome {
    /// Requested cell
    pub coord: ChunkCoord,
    /// Request tag echoed back
    pub generation: u64,
    /// What happened
    pub result: LoadResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LoadRequest {
    coord: ChunkCoord,
    generation: u64,
}

impl LoadOutcome {
    fn request(&self) -> LoadRequest {
        LoadRequest { coord: self.coord, generation: self.generation }
    }
}

enum Mode {
    Inline {
        ready: VecDeque<LoadOutcome>,
    },
    Pool {
        jobs: Option<Sender<LoadRequest>>,
        results: Receiver<LoadOutcome>,
        workers: Vec<JoinHandle<()>>,
        /// Sent to the pool and not handed back yet
        outstanding: HashSet<LoadRequest>,
    },
}

/// Fetch-and-decode pipeline for chunk files
pub struct ChunkLoader {
    source: Arc<dyn ChunkSource>,
    context: Arc<ChunkContext>,
    mode: Mode,
}

impl ChunkLoader {
    /// Start `workers` loader threads; `0` loads inline
    pub fn new(source: Arc<dyn ChunkSource>, context: Arc<ChunkContext>, workers: usize) -> Self {
        let mode = if workers == 0 {
            Mode::Inline { ready: VecDeque::new() }
        } else {
            Self::start_pool(&source, &context, workers)
        };
        Self { source, context, mode }
    }

    fn start_pool(source: &Arc<dyn ChunkSource>, context: &Arc<ChunkContext>, workers: usize) -> Mode {
        let (job_tx, job_rx) = unbounded::<LoadRequest>();
        let (result_tx, result_rx) = unbounded::<LoadOutcome>();

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let source = Arc::clone(source);
            let context = Arc::clone(context);
            let spawned = std::thread::Builder::new()
                .name(format!("chunk-loader-{index}"))
                .spawn(move || {
                    for request in jobs.iter() {
                        let outcome = load_one(source.as_ref(), &context, request);
                        if results.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => log::warn!("Could not start chunk loader thread {index}: {e}"),
            }
        }

        if handles.is_empty() {
            log::warn!("No chunk loader threads running; loading chunks inline");
            return Mode::Inline { ready: VecDeque::new() };
        }
        log::debug!("Started {} chunk loader threads", handles.len());
        Mode::Pool {
            jobs: Some(job_tx),
            results: result_rx,
            workers: handles,
            outstanding: HashSet::new(),
        }
    }

    /// Queue a cell for loading
    pub fn request(&mut self, coord: ChunkCoord, generation: u64) {
        let request = LoadRequest { coord, generation };
        let workers_gone = match &mut self.mode {
            Mode::Inline { ready } => {
                ready.push_back(load_one(self.source.as_ref(), &self.context, request));
                false
            }
            Mode::Pool { jobs, outstanding, .. } => {
                outstanding.insert(request);
                !jobs.as_ref().is_some_and(|tx| tx.send(request).is_ok())
            }
        };
        if workers_gone {
            self.fall_back_inline();
        }
    }

    /// Completions available right now
    pub fn try_completed(&mut self) -> Vec<LoadOutcome> {
        let mut done = Vec::new();
        let workers_gone = match &mut self.mode {
            Mode::Inline { ready } => {
                done.extend(ready.drain(..));
                false
            }
            Mode::Pool { results, outstanding, .. } => loop {
                match results.try_recv() {
                    Ok(outcome) => {
                        outstanding.remove(&outcome.request());
                        done.push(outcome);
                    }
                    Err(TryRecvError::Empty) => break false,
                    Err(TryRecvError::Disconnected) => break !outstanding.is_empty(),
                }
            },
        };
        if workers_gone {
            self.fall_back_inline();
            done.extend(self.try_completed());
        }
        done
    }

    /// Block until one completion arrives; `None` when nothing is in flight
    pub fn wait_completed(&mut self) -> Option<LoadOutcome> {
        loop {
            match &mut self.mode {
                Mode::Inline { ready } => return ready.pop_front(),
                Mode::Pool { results, outstanding, .. } => {
                    if outstanding.is_empty() {
                        return None;
                    }
                    if let Ok(outcome) = results.recv() {
                        outstanding.remove(&outcome.request());
                        return Some(outcome);
                    }
                }
            }
            self.fall_back_inline();
        }
    }

    /// Requests not yet handed back
    pub fn in_flight(&self) -> usize {
        match &self.mode {
            Mode::Inline { ready } => ready.len(),
            Mode::Pool { outstanding, .. } => outstanding.len(),
        }
    }

    /// Whether requests are served on the calling thread
    pub fn is_inline(&self) -> bool {
        matches!(self.mode, Mode::Inline { .. })
    }

    /// Shared chunk context
    pub fn context(&self) -> &Arc<ChunkContext> {
        &self.context
    }

    /// Switch to inline loading after every worker has stopped.
    ///
    /// Results the pool already produced are kept; requests it never
    /// answered are loaded here so no cell is left waiting.
    fn fall_back_inline(&mut self) {
        let (results, mut outstanding, workers) =
            match std::mem::replace(&mut self.mode, Mode::Inline { ready: VecDeque::new() }) {
                Mode::Pool { results, outstanding, workers, .. } => (results, outstanding, workers),
                inline @ Mode::Inline { .. } => {
                    self.mode = inline;
                    return;
                }
            };
        log::warn!(
            "Chunk loader threads stopped; loading {} outstanding chunks inline",
            outstanding.len()
        );

        let mut ready: VecDeque<LoadOutcome> = VecDeque::new();
        for outcome in results.try_iter() {
            outstanding.remove(&outcome.request());
            ready.push_back(outcome);
        }
        for request in outstanding {
            ready.push_back(load_one(self.source.as_ref(), &self.context, request));
        }
        for handle in workers {
            if handle.join().is_err() {
                log::warn!("Chunk loader thread panicked");
            }
        }
        self.mode = Mode::Inline { ready };
    }
}

impl Drop for ChunkLoader {
    fn drop(&mut self) {
        if let Mode::Pool { jobs, workers, .. } = &mut self.mode {
            // Closing the job channel ends every worker loop
            jobs.take();
            for handle in workers.drain(..) {
                if handle.join().is_err() {
                    log::warn!("Chunk loader thread panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for ChunkLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.mode {
            Mode::Inline { .. } => "inline".to_string(),
            Mode::Pool { workers, .. } => format!("{} workers", workers.len()),
        };
        f.debug_struct("ChunkLoader")
            .field("mode", &mode)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn load_one(source: &dyn ChunkSource, context: &ChunkContext, request: LoadRequest) -> LoadOutcome {
    let LoadRequest { coord, generation } = request;
    let result = match source.fetch_chunk(coord) {
        Ok(bytes) => match ChunkContents::from_slice(coord, &bytes, context) {
            Ok(contents) => LoadResult::Loaded(Box::new(contents)),
            Err(e) => LoadResult::Failed(e),
        },
        Err(e) if e.is_not_found() => LoadResult::Missing,
        Err(e) => LoadResult::Failed(ChunkError::Fetch(e)),
    };
    LoadOutcome { coord, generation, result }
}
