/// Page geometry and the layout cursor.
///
/// Coordinates are PDF points with the origin at the top-left corner of the
/// page and y growing downwards; the PDF writer flips them on output.

/// Physical page size and margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    /// Band below the printable area reserved for the footer pass
    pub footer_height: f32,
}

impl PageGeometry {
    /// A4 portrait with 40pt margins.
    pub const A4: PageGeometry = PageGeometry {
        width: 595.28,
        height: 841.89,
        margin_top: 40.0,
        margin_bottom: 40.0,
        margin_left: 40.0,
        margin_right: 40.0,
        footer_height: 24.0,
    };

    /// Lowest y that content may reach.
    pub fn printable_bottom(&self) -> f32 {
        self.height - self.margin_bottom - self.footer_height
    }

    /// Vertical space available on an empty page.
    pub fn printable_height(&self) -> f32 {
        self.printable_bottom() - self.margin_top
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_right(&self) -> f32 {
        self.width - self.margin_right
    }

    /// Whether a block of `required` height fits below the cursor.
    pub fn fits(&self, state: LayoutState, required: f32) -> bool {
        state.cursor_y + required <= self.printable_bottom()
    }

    /// The page-break decision.
    ///
    /// Returns the state to draw at and whether a new page was started. A
    /// block taller than a whole page is placed at the top of the current
    /// page when that page is still empty, so oversized content never
    /// produces a run of blank pages.
    pub fn break_if_needed(&self, state: LayoutState, required: f32) -> (LayoutState, bool) {
        if self.fits(state, required) || state.cursor_y <= self.margin_top {
            (state, false)
        } else {
            (self.next_page(state), true)
        }
    }

    /// Cursor at the top of the following page.
    pub fn next_page(&self, state: LayoutState) -> LayoutState {
        LayoutState { page_index: state.page_index + 1, cursor_y: self.margin_top }
    }

    pub fn first_page(&self) -> LayoutState {
        LayoutState { page_index: 0, cursor_y: self.margin_top }
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::A4
    }
}

/// Position of the layout cursor: which page, and how far down it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutState {
    pub page_index: usize,
    pub cursor_y: f32,
}

impl LayoutState {
    pub fn advanced(self, dy: f32) -> Self {
        Self { cursor_y: self.cursor_y + dy, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_and_breaks() {
        let geometry = PageGeometry::A4;
        let bottom = geometry.printable_bottom();
        let near_bottom = LayoutState { page_index: 2, cursor_y: bottom - 10.0 };

        assert!(geometry.fits(near_bottom, 10.0));
        assert!(!geometry.fits(near_bottom, 10.5));

        let (state, broke) = geometry.break_if_needed(near_bottom, 20.0);
        assert!(broke);
        assert_eq!(state, LayoutState { page_index: 3, cursor_y: geometry.margin_top });

        let (state, broke) = geometry.break_if_needed(near_bottom, 5.0);
        assert!(!broke);
        assert_eq!(state, near_bottom);
    }

    #[test]
    fn test_oversized_block_on_empty_page_does_not_break() {
        let geometry = PageGeometry::A4;
        let top = geometry.first_page();
        let (state, broke) = geometry.break_if_needed(top, geometry.printable_height() * 3.0);
        assert!(!broke);
        assert_eq!(state, top);
    }

    #[test]
    fn test_a4_dimensions() {
        let geometry = PageGeometry::default();
        assert!((geometry.content_width() - 515.28).abs() < 0.01);
        assert!(geometry.printable_height() > 700.0);
    }
}
