//! Actuators module - things the loggers do besides reading sensors

pub mod camera;
