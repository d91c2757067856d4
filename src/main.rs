mod app;
mod error;
mod forms_core;
mod model;
mod services;
mod theme;
mod ui;
mod widgets;

use anyhow::Result;

fn main() -> Result<()> {
    ui::run()
}
