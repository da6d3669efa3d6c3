//! Visual surface the decoding engine renders into

use serde::Serialize;

/// How the surface is laid out inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceLayout {
    /// Not displayed
    #[default]
    Hidden,
    /// Displayed at full width and height of its container
    Full,
}

/// The on-screen region a camera preview is drawn into
#[derive(Debug, Clone)]
pub struct VisualSurface {
    id: String,
    mounted: bool,
    layout: SurfaceLayout,
}

impl VisualSurface {
    /// A mounted, hidden surface
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mounted: true,
            layout: SurfaceLayout::Hidden,
        }
    }

    /// A surface whose element does not exist yet
    pub fn unmounted(id: impl Into<String>) -> Self {
        Self {
            mounted: false,
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn mount(&mut self) {
        self.mounted = true;
    }

    pub fn layout(&self) -> SurfaceLayout {
        self.layout
    }

    pub fn is_visible(&self) -> bool {
        self.layout == SurfaceLayout::Full
    }

    /// Show the surface at full size
    pub fn show_full(&mut self) {
        self.layout = SurfaceLayout::Full;
    }

    pub fn hide(&mut self) {
        self.layout = SurfaceLayout::Hidden;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_visibility() {
        let mut surface = VisualSurface::new("scanner-container");
        assert!(surface.is_mounted());
        assert!(!surface.is_visible());

        surface.show_full();
        assert_eq!(surface.layout(), SurfaceLayout::Full);

        surface.hide();
        surface.hide();
        assert!(!surface.is_visible());
    }

    #[test]
    fn test_unmounted_surface() {
        let mut surface = VisualSurface::unmounted("scanner-container");
        assert!(!surface.is_mounted());
        surface.mount();
        assert!(surface.is_mounted());
        assert_eq!(surface.id(), "scanner-container");
    }
}
