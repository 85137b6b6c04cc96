mod alert;
mod http;
mod kv;
mod timer;

pub use self::alert::{Alert, AlertOperation};
pub use self::http::{
    HttpCapability, HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpResult,
    MultipartForm,
};
pub use self::kv::{
    decode_json, KeyNamespace, KvCapability, KvError, KvKey, KvReadResult, KvWrite,
    KvWriteResult,
};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

// Crux's built-in Render covers view updates as-is.
pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::event::Event;

pub type AppHttp = HttpCapability;
pub type AppKv = KvCapability;
pub type AppRender = Render<Event>;
pub type AppTimer = Timer<Event>;
pub type AppAlert = Alert<Event>;

#[derive(crux_core::macros::Effect)]
#[effect(app = "crate::app::App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub key_value: KeyValue<Event>,
    pub timer: Timer<Event>,
    pub alert: Alert<Event>,
}
