mod timer;

pub use self::timer::{Timer, TimerOperation, TimerOutput};

pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "crate::app::App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub timer: Timer<Event>,
}
