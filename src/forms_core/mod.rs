pub mod codec;
pub mod editor;
pub mod registry;
pub mod renderer;
pub mod table;
