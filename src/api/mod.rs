pub mod address;
pub mod central;
pub mod device;
pub mod event;
pub mod operation;
pub mod profile;
pub mod transport;
