pub mod rmi;

pub use rmi::RmiFactor;
