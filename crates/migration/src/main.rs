use config::Config;
use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // DATABASE_URL from the environment wins; otherwise fall back to the
    // worker's config.yaml so both binaries point at the same database.
    if env::var("DATABASE_URL").is_err() {
        let settings = Config::builder()
            .add_source(config::File::with_name("config.yaml").required(false))
            .build()
            .unwrap();
        if let Ok(url) = settings.get_string("database_url") {
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
