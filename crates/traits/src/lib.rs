pub mod resource;
pub mod surface;

pub use resource::{
    FetchedResource, InMemoryFetcher, ResourceError, ResourceFetcher, SharedResourceData,
};
pub use surface::{HeightListener, HostSurface};
