//! Route table for the whole API.
//!
//! ## Structure
//! - **Service endpoints**: `/health`, `/readyz`, `/docs`
//! - **Account endpoints**: `/entebus/account`, `/entebus/account/token`,
//!   `/entebus/account/picture`
//! - **Fleet endpoints**: `/landmark`, `/landmark/bus_stop`, `/company`,
//!   `/company/route`, `/company/route/landmark`, `/company/bus`
//!
//! Every collection uses the same verb mapping: POST creates, PATCH
//! updates, GET searches, DELETE removes.

use crate::{
    handlers::{
        bus_handlers::{create_bus, delete_bus, list_buses, update_bus},
        bus_stop_handlers::{create_bus_stop, delete_bus_stop, list_bus_stops, update_bus_stop},
        company_handlers::{create_company, delete_company, list_companies, update_company},
        executive_handlers::{
            create_executive, delete_executive, list_executives, update_executive,
        },
        health_handlers::{docs, health, readyz},
        landmark_handlers::{create_landmark, delete_landmark, list_landmarks, update_landmark},
        picture_handlers::{delete_picture, download_picture, upload_picture},
        route_handlers::{
            clear_sequence, create_route, delete_route, list_routes, list_sequence,
            replace_sequence, update_route, update_sequence_entry,
        },
        token_handlers::{create_token, delete_token, list_tokens, refresh_token},
    },
    state::AppState,
    urls,
};
use axum::{routing::get, routing::post, Router};

/// Build the router carrying shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // service endpoints
        .route(urls::HEALTH, get(health))
        .route(urls::READYZ, get(readyz))
        .route(urls::DOCS, get(docs))
        // accounts
        .route(
            urls::ACCOUNT_TOKEN,
            post(create_token)
                .patch(refresh_token)
                .get(list_tokens)
                .delete(delete_token),
        )
        .route(
            urls::ACCOUNT,
            post(create_executive)
                .patch(update_executive)
                .get(list_executives)
                .delete(delete_executive),
        )
        .route(
            urls::ACCOUNT_PICTURE,
            post(upload_picture)
                .get(download_picture)
                .delete(delete_picture),
        )
        // fleet entities
        .route(
            urls::LANDMARK,
            post(create_landmark)
                .patch(update_landmark)
                .get(list_landmarks)
                .delete(delete_landmark),
        )
        .route(
            urls::BUS_STOP,
            post(create_bus_stop)
                .patch(update_bus_stop)
                .get(list_bus_stops)
                .delete(delete_bus_stop),
        )
        .route(
            urls::COMPANY,
            post(create_company)
                .patch(update_company)
                .get(list_companies)
                .delete(delete_company),
        )
        .route(
            urls::ROUTE,
            post(create_route)
                .patch(update_route)
                .get(list_routes)
                .delete(delete_route),
        )
        .route(
            urls::LANDMARK_IN_ROUTE,
            post(replace_sequence)
                .patch(update_sequence_entry)
                .get(list_sequence)
                .delete(clear_sequence),
        )
        .route(
            urls::BUS,
            post(create_bus)
                .patch(update_bus)
                .get(list_buses)
                .delete(delete_bus),
        )
}
