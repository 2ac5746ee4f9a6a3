//! Helpers for files exported from RenderDoc captures of nv2a test programs.
pub mod draws;
pub mod mesh;
