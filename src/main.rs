use gitweave::ui::output;

fn main() {
    if let Err(err) = gitweave::cli::run() {
        // User-facing errors are already multi-line reports; print them
        // without the anyhow chain noise.
        match err.downcast_ref::<gitweave::engine::UserError>() {
            Some(user) => output::error(user),
            None => output::error(format!("{:#}", err)),
        }
        std::process::exit(1);
    }
}
