pub mod cli;
pub mod config;
pub mod editor;
pub mod input;
pub mod manipulation;
pub mod mesh;
pub mod physics;
pub mod picking;
pub mod properties;
pub mod render;
pub mod scene;
pub mod state;
pub mod stepper;
pub mod toolbar;
pub mod ui;
