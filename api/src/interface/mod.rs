pub mod procctl;
