//! Color constants for the terminal user interface.

use ratatui::style::Color;

// Column accents follow the task status.

// Native Color::Blue is used for Pending

/// Used for in-progress work
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Used for overdue work
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Used for completed work
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// Used for cancelled work
pub const SLATE: Color = Color::Rgb(90, 96, 105);
