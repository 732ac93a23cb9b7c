pub mod alerts;
pub mod menu;
pub mod reconciler;
