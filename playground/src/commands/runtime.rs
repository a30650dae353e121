//! `playground runtime`: bring up the Python runtime and report on it.

use anyhow::Result;
use playground_sandbox::python;
use playground_sandbox::LoaderState;

fn describe_state(state: &LoaderState) -> String {
    match state {
        LoaderState::Uninitialized => "not loaded".to_string(),
        LoaderState::Pending => "loading".to_string(),
        LoaderState::Ready => "ready".to_string(),
        LoaderState::Failed(err) => format!("failed ({})", err),
    }
}

pub async fn show_runtime() -> Result<()> {
    let loader = python::shared_loader();
    println!("JavaScript: embedded QuickJS");
    println!("Python driver: {}", loader.host().driver_path().display());

    match loader.acquire().await {
        Ok(runtime) => println!(
            "Python: {} ({})",
            runtime.version(),
            runtime.interpreter().display()
        ),
        Err(err) => println!("Python: unavailable: {}", err),
    }
    println!("Python loader: {}", describe_state(&loader.state()));
    Ok(())
}
