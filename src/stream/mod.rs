mod streamer;

pub use streamer::{
    never_stop, ControlSignal, EventStream, ResponseStreamer, StopCheck, StreamEvent,
};
