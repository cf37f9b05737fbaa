//! Static/animated split layer rendering
//!
//! Layers without animated tiles are composited once into off-screen rasters
//! and blitted each frame, one raster per run of consecutive static layers.
//! Layers with at least one animated tile are drawn tile by tile with
//! viewport culling. Everything is drawn in z order. Depth tiles are left out of both
//! paths; they render as individual Y-sorted sprites.

use std::sync::Arc;

use image::RgbaImage;

use crate::foundation::math::Vec2;
use crate::render::canvas::Canvas;
use crate::render::context::DrawContext;
use crate::render::tileset::Tileset;
use crate::scene::component::{Drawable, FrameInfo, Steppable};
use crate::tilemap::animation::TileAnimator;
use crate::tilemap::document::TileMapDocument;
use crate::tilemap::parser::{TileLayer, TileObject};
use crate::tilemap::properties::TileCatalog;

/// Default culling margin around animated tiles
pub const DEFAULT_TILE_PADDING: f32 = 16.0;

/// Split `layers` into `(static, animated)`, each sorted by z index.
///
/// A layer is animated if any of its tiles has an animation.
pub fn separate_layers(layers: Vec<TileLayer>, catalog: &TileCatalog) -> (Vec<TileLayer>, Vec<TileLayer>) {
    let (mut animated, mut still): (Vec<_>, Vec<_>) = layers
        .into_iter()
        .partition(|layer| layer.tiles.iter().any(|t| catalog.is_animated(t.tile.id)));
    still.sort_by_key(|l| l.z_index);
    animated.sort_by_key(|l| l.z_index);
    (still, animated)
}

/// Composite visible static layers into one raster covering `extent`
/// pixels from world position `origin`. Depth tiles are skipped.
pub fn prerender_static_layers(
    layers: &[TileLayer],
    tileset: &Tileset,
    catalog: &TileCatalog,
    origin: Vec2,
    extent: (u32, u32),
) -> Option<RgbaImage> {
    if layers.is_empty() || extent.0 == 0 || extent.1 == 0 {
        return None;
    }
    let mut canvas = Canvas::new(extent.0, extent.1);
    for layer in layers.iter().filter(|l| l.visible) {
        for placed in &layer.tiles {
            if catalog.properties(placed.tile.id).is_depth() {
                continue;
            }
            canvas.draw_tile(tileset, placed.tile, placed.x - origin.x, placed.y - origin.y, layer.opacity);
        }
    }
    log::trace!("Pre-rendered {} static layers into {}x{}", layers.len(), extent.0, extent.1);
    Some(canvas.into_image())
}

/// One z-ordered drawing step
#[derive(Debug)]
enum LayerPass {
    /// Consecutive static layers composited into one raster
    Baked {
        layers: Vec<TileLayer>,
        raster: Option<RgbaImage>,
    },
    /// Layer drawn tile by tile
    Animated(TileLayer),
}

/// Interleave z-sorted static and animated layers into passes.
///
/// Static layers with no animated layer between them share one raster, so a
/// map whose animated layers all sit on top still costs a single blit.
fn z_ordered_passes(still: Vec<TileLayer>, animated: Vec<TileLayer>) -> Vec<LayerPass> {
    let mut passes: Vec<LayerPass> = Vec::new();
    let mut still = still.into_iter().peekable();
    let mut animated = animated.into_iter().peekable();

    loop {
        let take_still = match (still.peek(), animated.peek()) {
            (Some(s), Some(a)) => s.z_index < a.z_index,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        if take_still {
            let Some(layer) = still.next() else { break };
            match passes.last_mut() {
                Some(LayerPass::Baked { layers, .. }) => layers.push(layer),
                _ => passes.push(LayerPass::Baked { layers: vec![layer], raster: None }),
            }
        } else if let Some(layer) = animated.next() {
            passes.push(LayerPass::Animated(layer));
        }
    }
    passes
}

/// Renderer for one document or chunk worth of layers
#[derive(Debug)]
pub struct LayerRenderer {
    tileset: Arc<Tileset>,
    catalog: Arc<TileCatalog>,
    origin: Vec2,
    extent: (u32, u32),
    passes: Vec<LayerPass>,
    tile_objects: Vec<TileObject>,
    animator: TileAnimator,
    tile_padding: f32,
}

impl LayerRenderer {
    /// Partition `layers` and pre-render the static ones.
    ///
    /// # Arguments
    /// * `origin` - World position of the area's top-left corner
    /// * `extent` - Size of the area in pixels
    pub fn new(
        tileset: Arc<Tileset>,
        catalog: Arc<TileCatalog>,
        origin: Vec2,
        extent: (u32, u32),
        layers: Vec<TileLayer>,
        tile_objects: Vec<TileObject>,
    ) -> Self {
        let (still, animated) = separate_layers(layers, &catalog);
        let mut passes = z_ordered_passes(still, animated);
        for pass in &mut passes {
            if let LayerPass::Baked { layers, raster } = pass {
                *raster = prerender_static_layers(layers, &tileset, &catalog, origin, extent);
            }
        }
        let animator = TileAnimator::new(&catalog);
        Self {
            tileset,
            catalog,
            origin,
            extent,
            passes,
            tile_objects,
            animator,
            tile_padding: DEFAULT_TILE_PADDING,
        }
    }

    /// Renderer for a parsed document; `None` until it is parsed
    pub fn for_document(document: &TileMapDocument) -> Option<Self> {
        let tileset = document.tileset()?;
        Some(Self::new(
            tileset,
            document.catalog(),
            Vec2::zeros(),
            document.pixel_size(),
            document.layers().to_vec(),
            document.tile_objects().to_vec(),
        ))
    }

    /// Set the culling margin for animated tiles
    pub fn with_tile_padding(mut self, padding: f32) -> Self {
        self.tile_padding = padding;
        self
    }

    /// Layers baked into rasters, in z order
    pub fn static_layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.passes.iter().flat_map(|pass| match pass {
            LayerPass::Baked { layers, .. } => layers.as_slice(),
            LayerPass::Animated(_) => &[][..],
        })
    }

    /// Layers drawn per tile, in z order
    pub fn animated_layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.passes.iter().filter_map(|pass| match pass {
            LayerPass::Animated(layer) => Some(layer),
            LayerPass::Baked { .. } => None,
        })
    }

    /// Pre-rendered static rasters, in z order
    pub fn rasters(&self) -> impl Iterator<Item = &RgbaImage> {
        self.passes.iter().filter_map(|pass| match pass {
            LayerPass::Baked { raster, .. } => raster.as_ref(),
            LayerPass::Animated(_) => None,
        })
    }

    /// World position of the covered area
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Size of the covered area in pixels
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    /// Advance tile animations
    pub fn advance(&mut self, delta_ms: f32) {
        self.animator.advance(&self.catalog, delta_ms);
    }

    /// Drop the rasters and layer data
    pub fn release(&mut self) {
        self.passes.clear();
        self.tile_objects.clear();
    }

    /// Draw with the world origin at screen `(x, y)`.
    ///
    /// Passes run in z order; tile objects are drawn last.
    pub fn draw_image(&self, ctx: &mut dyn DrawContext, x: f32, y: f32) {
        for pass in &self.passes {
            match pass {
                LayerPass::Baked { raster: Some(raster), .. } => self.draw_raster(ctx, raster, x, y),
                LayerPass::Baked { raster: None, .. } => {}
                LayerPass::Animated(layer) if layer.visible => self.draw_animated(ctx, layer, x, y),
                LayerPass::Animated(_) => {}
            }
        }

        let (tw, th) = (self.tileset.tile_width() as f32, self.tileset.tile_height() as f32);
        for object in self.tile_objects.iter().filter(|o| !o.properties.is_depth()) {
            let (sx, sy) = (x + object.x, y + object.y);
            if !ctx.is_visible(sx, sy, tw, th, self.tile_padding) {
                continue;
            }
            let mut tile = object.tile;
            tile.id = self.animator.current_tile(&self.catalog, tile.id);
            ctx.draw_tile(&self.tileset, tile, sx, sy, 1.0);
        }
    }

    fn draw_raster(&self, ctx: &mut dyn DrawContext, raster: &RgbaImage, x: f32, y: f32) {
        let (rx, ry) = (x + self.origin.x, y + self.origin.y);
        if !ctx.is_visible(rx, ry, raster.width() as f32, raster.height() as f32, 0.0) {
            return;
        }
        ctx.draw_raster(raster, rx, ry, 1.0);
    }

    fn draw_animated(&self, ctx: &mut dyn DrawContext, layer: &TileLayer, x: f32, y: f32) {
        let (tw, th) = (self.tileset.tile_width() as f32, self.tileset.tile_height() as f32);
        for placed in &layer.tiles {
            if self.catalog.properties(placed.tile.id).is_depth() {
                continue;
            }
            let (sx, sy) = (x + placed.x, y + placed.y);
            if !ctx.is_visible(sx, sy, tw, th, self.tile_padding) {
                continue;
            }
            let mut tile = placed.tile;
            tile.id = self.animator.current_tile(&self.catalog, tile.id);
            ctx.draw_tile(&self.tileset, tile, sx, sy, layer.opacity);
        }
    }
}

impl Steppable for LayerRenderer {
    fn step(&mut self, delta_ms: f32, _frame: &FrameInfo) {
        self.advance(delta_ms);
    }
}

impl Drawable for LayerRenderer {
    fn draw(&self, ctx: &mut dyn DrawContext, x: f32, y: f32) {
        self.draw_image(ctx, x, y);
    }
}

/// Scene component that renders a [`TileMapDocument`] once it has loaded
#[derive(Debug)]
pub struct DocumentRenderer {
    document: TileMapDocument,
    renderer: Option<LayerRenderer>,
    tile_padding: f32,
}

impl DocumentRenderer {
    /// Wrap a document that may still be loading
    pub fn new(document: TileMapDocument) -> Self {
        Self {
            document,
            renderer: None,
            tile_padding: DEFAULT_TILE_PADDING,
        }
    }

    /// Set the culling margin for animated tiles
    pub fn with_tile_padding(mut self, padding: f32) -> Self {
        self.tile_padding = padding;
        self
    }

    /// Backing document
    pub fn document(&self) -> &TileMapDocument {
        &self.document
    }

    /// Layer renderer, once the document is parsed
    pub fn renderer(&self) -> Option<&LayerRenderer> {
        self.renderer.as_ref()
    }

    /// Parse the document and build the renderer as soon as possible
    pub fn sync(&mut self) -> bool {
        if self.renderer.is_none() && self.document.parse() {
            self.renderer = LayerRenderer::for_document(&self.document)
                .map(|r| r.with_tile_padding(self.tile_padding));
        }
        self.renderer.is_some()
    }
}

impl Steppable for DocumentRenderer {
    fn step(&mut self, delta_ms: f32, _frame: &FrameInfo) {
        if self.sync() {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.advance(delta_ms);
            }
        }
    }
}

impl Drawable for DocumentRenderer {
    fn draw(&self, ctx: &mut dyn DrawContext, x: f32, y: f32) {
        if let Some(renderer) = &self.renderer {
            renderer.draw_image(ctx, x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::draw_list::{DrawCommand, DrawList};
    use crate::tilemap::animation::{Animation, AnimationFrame};
    use crate::tilemap::format::TileRef;
    use crate::tilemap::parser::PlacedTile;
    use crate::tilemap::properties::{PropertyBag, PropertyValue};
    use image::Rgba;

    fn catalog() -> TileCatalog {
        let mut catalog = TileCatalog::new();
        catalog.set_animation(
            1,
            Animation::new(vec![AnimationFrame::new(1, 100), AnimationFrame::new(2, 100)]),
        );
        let mut depth = PropertyBag::new();
        depth.insert("depth", PropertyValue::Bool(true));
        catalog.set_properties(3, depth);
        catalog
    }

    fn tileset() -> Arc<Tileset> {
        let mut img = RgbaImage::new(64, 16);
        for (x, _, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x / 16) as u8 * 60, 0, 0, 255]);
        }
        Arc::new(Tileset::new(Arc::new(img), 16, 16).unwrap())
    }

    fn layer(name: &str, z_index: usize, tiles: &[(u32, f32, f32)]) -> TileLayer {
        TileLayer {
            name: name.to_string(),
            z_index,
            visible: true,
            opacity: 1.0,
            tiles: tiles
                .iter()
                .map(|(id, x, y)| PlacedTile { tile: TileRef::new(*id), x: *x, y: *y })
                .collect(),
        }
    }

    #[test]
    fn test_separate_layers() {
        let layers = vec![
            layer("water", 2, &[(1, 0.0, 0.0)]),
            layer("top", 3, &[(0, 0.0, 0.0)]),
            layer("ground", 0, &[(0, 0.0, 0.0), (2, 16.0, 0.0)]),
        ];
        let (still, animated) = separate_layers(layers, &catalog());
        assert_eq!(still.iter().map(|l| l.z_index).collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(animated.len(), 1);
        assert_eq!(animated[0].name, "water");
    }

    #[test]
    fn test_prerender_skips_depth_and_hidden() {
        let mut hidden = layer("hidden", 1, &[(2, 16.0, 0.0)]);
        hidden.visible = false;
        let layers = vec![layer("ground", 0, &[(2, 0.0, 0.0), (3, 16.0, 0.0)]), hidden];

        let raster = prerender_static_layers(&layers, &tileset(), &catalog(), Vec2::zeros(), (32, 16)).unwrap();
        assert_eq!(raster.get_pixel(0, 0).0, [120, 0, 0, 255]);
        assert_eq!(raster.get_pixel(16, 0).0[3], 0);
    }

    #[test]
    fn test_prerender_respects_origin() {
        let layers = vec![layer("ground", 0, &[(2, 1040.0, 16.0)])];
        let raster =
            prerender_static_layers(&layers, &tileset(), &catalog(), Vec2::new(1024.0, 0.0), (32, 32)).unwrap();
        assert_eq!(raster.get_pixel(16, 16).0[3], 255);
        assert_eq!(raster.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_draw_blits_raster_and_animated_tiles() {
        let layers = vec![
            layer("ground", 0, &[(0, 0.0, 0.0)]),
            layer("water", 1, &[(1, 16.0, 0.0), (1, 5000.0, 0.0), (3, 32.0, 0.0)]),
        ];
        let mut renderer = LayerRenderer::new(tileset(), Arc::new(catalog()), Vec2::zeros(), (64, 64), layers, vec![]);
        assert_eq!(renderer.rasters().count(), 1);

        let mut ctx = DrawList::new(320, 240);
        renderer.draw_image(&mut ctx, 10.0, 20.0);
        assert_eq!(ctx.raster_count(), 1);
        // Far tile culled, depth tile skipped
        assert_eq!(ctx.tile_ids(), vec![1]);
        assert!(matches!(ctx.commands()[1], DrawCommand::Tile { x, y, .. } if x == 26.0 && y == 20.0));

        renderer.advance(100.0);
        ctx.clear();
        renderer.draw_image(&mut ctx, 0.0, 0.0);
        assert_eq!(ctx.tile_ids(), vec![2]);
    }

    #[test]
    fn test_layers_composite_in_z_order() {
        // Animated water under a static bridge on the same cell
        let layers = vec![layer("bridge", 1, &[(0, 0.0, 0.0)]), layer("water", 0, &[(1, 0.0, 0.0)])];
        let renderer = LayerRenderer::new(tileset(), Arc::new(catalog()), Vec2::zeros(), (16, 16), layers, vec![]);

        let mut ctx = DrawList::new(320, 240);
        renderer.draw_image(&mut ctx, 0.0, 0.0);
        assert_eq!(ctx.len(), 2);
        assert!(matches!(ctx.commands()[0], DrawCommand::Tile { tile, .. } if tile.id == 1));
        assert!(matches!(ctx.commands()[1], DrawCommand::Raster { .. }));
    }

    #[test]
    fn test_static_runs_share_a_raster() {
        let layers = vec![
            layer("ground", 0, &[(0, 0.0, 0.0)]),
            layer("path", 1, &[(2, 0.0, 0.0)]),
            layer("water", 2, &[(1, 16.0, 0.0)]),
            layer("bridge", 3, &[(0, 16.0, 0.0)]),
        ];
        let renderer = LayerRenderer::new(tileset(), Arc::new(catalog()), Vec2::zeros(), (32, 16), layers, vec![]);
        assert_eq!(renderer.rasters().count(), 2);
        assert_eq!(renderer.static_layers().map(|l| l.z_index).collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(renderer.animated_layers().map(|l| l.z_index).collect::<Vec<_>>(), vec![2]);

        let mut ctx = DrawList::new(320, 240);
        renderer.draw_image(&mut ctx, 0.0, 0.0);
        let kinds: Vec<&str> = ctx
            .commands()
            .iter()
            .map(|c| match c {
                DrawCommand::Raster { .. } => "raster",
                DrawCommand::Tile { .. } => "tile",
            })
            .collect();
        assert_eq!(kinds, vec!["raster", "tile", "raster"]);
    }

    #[test]
    fn test_off_screen_raster_is_culled() {
        let layers = vec![layer("ground", 0, &[(0, 0.0, 0.0)])];
        let renderer =
            LayerRenderer::new(tileset(), Arc::new(catalog()), Vec2::new(1024.0, 0.0), (64, 64), layers, vec![]);

        let mut ctx = DrawList::new(320, 240);
        renderer.draw_image(&mut ctx, 0.0, 0.0);
        assert!(ctx.is_empty());

        renderer.draw_image(&mut ctx, -1000.0, 0.0);
        assert_eq!(ctx.raster_count(), 1);
    }

    #[test]
    fn test_release_drops_raster() {
        let layers = vec![layer("ground", 0, &[(0, 0.0, 0.0)])];
        let mut renderer = LayerRenderer::new(tileset(), Arc::new(catalog()), Vec2::zeros(), (16, 16), layers, vec![]);
        renderer.release();
        assert_eq!(renderer.rasters().count(), 0);

        let mut ctx = DrawList::new(320, 240);
        renderer.draw_image(&mut ctx, 0.0, 0.0);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_document_renderer_waits_for_parse() {
        let map: crate::tilemap::format::MapData = serde_json::from_value(serde_json::json!({
            "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
            "layers": [{"name": "g", "type": "tilelayer", "data": [1]}]
        }))
        .unwrap();
        let (image, writer) = crate::assets::Resource::pending("tiles");
        let document = TileMapDocument::new(crate::assets::Resource::ready("map", map), image);
        let mut node = DocumentRenderer::new(document);
        let frame = FrameInfo::new(16.0, Vec2::new(320.0, 240.0));

        node.step(16.0, &frame);
        assert!(node.renderer().is_none());

        writer.complete(Ok(RgbaImage::new(16, 16)));
        node.step(16.0, &frame);
        assert!(node.renderer().is_some());
        assert_eq!(node.renderer().map(|r| r.static_layers().count()), Some(1));
    }
}
