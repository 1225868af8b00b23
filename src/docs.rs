use utoipa::OpenApi;
use crate::{handlers, models};

#[derive(OpenApi)]
#[openapi(
    info(title = "meross-rest", description = "Switch the outlets of a Meross power strip"),
    paths(
        handlers::index,
        handlers::healthcheck,
        handlers::sockets,
        handlers::sockets_default_outlet,
    ),
    components(
        schemas(models::StatusResponse, models::Operation, models::OutletIndex)
    )
)]
pub struct ApiDoc;
