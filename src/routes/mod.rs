// Route exports
pub mod snapshot;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(snapshot::configure),
    );
}
