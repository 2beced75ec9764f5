pub mod composite;
pub mod fade;
pub mod fill;
pub mod history;
pub mod input;
pub mod messages;
pub mod model;
pub mod render;
pub mod save;
pub mod service;
pub mod settings;
pub mod settings_store;
pub mod state;
pub mod surface;
pub mod tools;

pub use messages::SurfaceEvent;
pub use model::{Color, Point, StrokeStyle, Tool};
pub use service::DrawingSurface;
pub use settings::SurfaceSettings;
