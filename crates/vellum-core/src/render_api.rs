use crate::view::Scene;

/// The external 2D host that rasterizes scenes. Vellum never draws pixels
/// itself.
pub trait RenderBackend {
    fn configure_surface(&mut self, width: u32, height: u32);
    fn frame(&mut self, scene: &Scene);
}
