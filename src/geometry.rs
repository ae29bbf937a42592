use serde::Serialize;

/// Destination rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DrawRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DrawRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn at_origin(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Tile and canvas dimensions the strategies draw against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileGeometry {
    tile_width: u32,
    tile_height: u32,
    canvas_width: u32,
    canvas_height: u32,
}

impl TileGeometry {
    pub fn new(tile: (u32, u32), canvas: (u32, u32)) -> Self {
        Self {
            tile_width: tile.0,
            tile_height: tile.1,
            canvas_width: canvas.0,
            canvas_height: canvas.1,
        }
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn canvas_width(&self) -> u32 {
        self.canvas_width
    }

    pub fn canvas_height(&self) -> u32 {
        self.canvas_height
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }

    pub fn canvas_rect(&self) -> DrawRect {
        DrawRect::at_origin(self.canvas_width, self.canvas_height)
    }

    /// Rectangle of the tile with its top-left corner at `(x, y)`.
    pub fn tile_rect_at(&self, x: i32, y: i32) -> DrawRect {
        DrawRect::new(x, y, self.tile_width, self.tile_height)
    }

    /// Applies a canvas resize. Returns whether the canvas actually changed.
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == self.canvas_size() {
            return false;
        }
        self.canvas_width = width;
        self.canvas_height = height;
        true
    }

    /// Whole tile columns that fit across the canvas.
    pub fn whole_columns(&self) -> u32 {
        self.canvas_width.checked_div(self.tile_width).unwrap_or(0)
    }

    /// Whole tile rows that fit down the canvas.
    pub fn whole_rows(&self) -> u32 {
        self.canvas_height.checked_div(self.tile_height).unwrap_or(0)
    }

    /// True when whole tiles cover the canvas with nothing left at the right or bottom edge.
    pub fn is_exact_multiple(&self) -> bool {
        self.tile_width > 0
            && self.tile_height > 0
            && self.canvas_width % self.tile_width == 0
            && self.canvas_height % self.tile_height == 0
    }
}
