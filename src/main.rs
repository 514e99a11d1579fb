#[tokio::main]
async fn main() {
    if let Err(e) = school_health_lib::run().await {
        eprintln!("school-health: {e}");
        std::process::exit(1);
    }
}
