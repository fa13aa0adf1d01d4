//! Headless page layout: loads a page's images through a session, then lays
//! out every section from estimates and decoded image sizes.

use log::{info, warn};
use serde::Serialize;
use tabula_core::RenderSession;
use tabula_layout::GridLayout;
use tabula_types::Page;

#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub src: String,
    /// Decoded size in pixels, when loading succeeded.
    pub size: Option<(u32, u32)>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub index: usize,
    pub height: f32,
    pub grid: Option<GridLayout>,
    pub images: Vec<ImageReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub width: f32,
    pub total_height: f32,
    pub sections: Vec<SectionReport>,
}

/// Lays out `page` at `width`.
///
/// With `wait_for_images` every referenced image is loaded (or fails) before
/// layout; otherwise images still loading are sized as placeholders.
pub async fn layout_page(session: &RenderSession, page: &Page, width: f32, wait_for_images: bool) -> PageReport {
    let mut sections = Vec::with_capacity(page.sections.len());

    for (index, section) in page.sections.iter().enumerate() {
        let inputs = session.inputs(index, section.clone(), width);
        let sources: Vec<String> = inputs.image_sources().into_iter().map(str::to_owned).collect();

        // Start every load before waiting on any of them
        session.cache().prefetch(&sources);
        let mut images = Vec::new();
        if wait_for_images {
            for src in sources {
                match session.cache().load(&src).await {
                    Ok(image) => images.push(ImageReport {
                        src,
                        size: Some((image.width(), image.height())),
                        error: None,
                    }),
                    Err(e) => {
                        warn!("Image {} failed: {}", src, e);
                        images.push(ImageReport {
                            src,
                            size: None,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }

        sections.push(SectionReport {
            index,
            height: session.estimate_section(&inputs),
            grid: session.layout_grid(&inputs),
            images,
        });
    }

    let total_height = sections.iter().map(|s| s.height).sum();
    info!(
        "Laid out {} section(s) at {}px: {:.1}px total",
        sections.len(),
        width,
        total_height
    );
    PageReport {
        width,
        total_height,
        sections,
    }
}
