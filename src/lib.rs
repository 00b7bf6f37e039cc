pub mod fast3d;
