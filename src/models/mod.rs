pub mod k8s;
pub mod node;
pub mod views;
