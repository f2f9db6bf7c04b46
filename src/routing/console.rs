//! Route table of the records console.

use super::RouteRecord;
use crate::identity::permissions::{DOCUMENT_CREATE, DOCUMENT_READ, DOCUMENT_UPDATE};

// list / create / detail / edit pages of one records area
fn crud_group(path: &str, prefix: &str, detail: &str, extra: Vec<RouteRecord>) -> RouteRecord {
    let mut children = vec![
        RouteRecord::new("").name(format!("{}-list", prefix)).permissions([DOCUMENT_READ]),
        RouteRecord::new("crear").name(format!("{}-create", prefix)).permissions([DOCUMENT_CREATE]),
        RouteRecord::new(":id").name(format!("{}-{}", prefix, detail)).permissions([DOCUMENT_READ]),
        RouteRecord::new(":id/edit").name(format!("{}-edit", prefix)).permissions([DOCUMENT_UPDATE]),
    ];
    children.extend(extra);
    RouteRecord::new(path).name(path).children(children)
}

pub fn console_routes() -> Vec<RouteRecord> {
    vec![
        RouteRecord::new("/").requires_auth().children(vec![
            RouteRecord::new("").name("Dashboard"),
            RouteRecord::new("documents").name("Documents").roles(["ADMIN"]),
            RouteRecord::new("documents/create").name("CreateDocument").roles(["ADMIN"]),
            RouteRecord::new("documents/:id").name("DocumentDetail"),
            RouteRecord::new("documents/:id/edit").name("EditDocument"),
            RouteRecord::new("users").name("Users").roles(["ADMIN"]),
            RouteRecord::new("users/create").name("CreateUser").roles(["ADMIN"]),
            RouteRecord::new("users/:id/edit").name("EditUser").roles(["ADMIN"]),
            RouteRecord::new("search-documents").name("SearchDocuments"),
            RouteRecord::new("activity-log").name("ActivityLog").roles(["ADMIN"]),
            RouteRecord::new("access-control").name("AccessControl").roles(["ADMIN"]),
            RouteRecord::new("tags-types").name("TagsAndTypes").roles(["ADMIN"]),
            crud_group("inventarios", "inventario", "view", vec![]),
            crud_group(
                "catalogo-transferencia",
                "catalogo-transferencia",
                "detalle",
                vec![RouteRecord::new(":id/detalles").name("catalogo-transferencia-detalles").permissions([DOCUMENT_UPDATE])],
            ),
            crud_group("registro-transferencia", "registro-transferencia", "detalle", vec![]),
        ]),
        RouteRecord::new("/login").children(vec![RouteRecord::new("").name("Login")]),
        RouteRecord::new("/").children(vec![
            RouteRecord::new("unauthorized").name("Unauthorized"),
            RouteRecord::new(":catchAll(.*)").name("NotFound"),
        ]),
    ]
}
