pub mod gh;
