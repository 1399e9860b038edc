// src/lib.rs
//
// armlink - WebSocket to serial bridge for robot arm servo control.
//
// The browser control UI emits JSON command messages over WebSocket; the
// bridge translates them into binary frames for the Arduino servo
// controller and forwards the controller's ASCII diagnostic lines back
// to the UI.

#[macro_use]
mod logging;

pub mod bridge;
pub mod cli;
pub mod io;
pub mod server;
