use std::io::Cursor;

use tiny_http::{Header, Request, Response, Server};

use crate::storage::{ObjectStore, TableStore};

use super::{Dashboard, Reply};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Answers requests until the server is unblocked.
pub fn serve<O: ObjectStore, T: TableStore>(server: &Server, dashboard: &Dashboard<O, T>) {
    for request in server.incoming_requests() {
        let reply = dashboard.handle(request.method().as_str(), request.url());
        log_info!("{} {} -> {}", request.method(), request.url(), reply.status);
        respond(request, reply);
    }
    log_info!("Dashboard stopped");
}

fn respond(request: Request, reply: Reply) {
    if let Err(err) = request.respond(into_response(reply)) {
        log_warn!("Failed to write dashboard response: {err}");
    }
}

fn into_response(reply: Reply) -> Response<Cursor<Vec<u8>>> {
    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes("Content-Type", reply.content_type) {
        response.add_header(header);
    }
    if let Some(name) = reply.attachment {
        let value = format!("attachment; filename=\"{}\"", name.replace('"', ""));
        if let Ok(header) = Header::from_bytes("Content-Disposition", value) {
            response.add_header(header);
        }
    }
    response
}
