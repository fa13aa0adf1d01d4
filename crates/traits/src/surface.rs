//! The host surface: the external renderer that actually lays out and paints
//! regions, and the upward callback through which stabilized heights leave
//! the convergence loop.

use async_trait::async_trait;
use tabula_types::RegionKey;

/// Measurement capability of the rendering host.
#[async_trait]
pub trait HostSurface: Send + Sync {
    /// Current pixel height of a region, or `0.0` if it has not been laid out yet.
    fn measure_height(&self, region: &RegionKey) -> f32;

    /// Resolves after the host has completed one more layout/paint cycle.
    async fn next_paint(&self);
}

/// Receives the stabilized total height of a region set.
pub trait HeightListener: Send + Sync {
    fn on_height_stabilized(&self, height: f32);
}

impl<F> HeightListener for F
where
    F: Fn(f32) + Send + Sync,
{
    fn on_height_stabilized(&self, height: f32) {
        self(height)
    }
}
