//! Left-hand options menus, one per controller.

use crate::context::RequestContext;
use crate::menu::{MenuItem, ResolvedMenu};
use crate::settings::Settings;

/// Options menu for `controller`, if it has one.
pub fn options_menu(controller: &str, settings: &Settings) -> Option<MenuItem> {
    match controller {
        "inv" => Some(inv(settings)),
        "org" => Some(org()),
        "req" => Some(req(settings)),
        "deploy" => Some(deploy()),
        _ => None,
    }
}

/// Build and resolve the options menu of `controller` for one request.
pub fn resolve_options_menu(ctx: &RequestContext, controller: &str) -> Option<ResolvedMenu> {
    options_menu(controller, ctx.settings())?.resolve(ctx)
}

fn crud(new_label: &str) -> [MenuItem; 2] {
    [MenuItem::new(new_label).m("create"), MenuItem::new("List All")]
}

fn facilities() -> MenuItem {
    MenuItem::new("Facilities").f("facility").children([
        MenuItem::new("New").m("create"),
        MenuItem::new("List All"),
        MenuItem::new("Map").m("map"),
        MenuItem::new("Search").m("search"),
        MenuItem::new("Import").m("import"),
    ])
}

fn item_categories(settings: &Settings) -> MenuItem {
    MenuItem::new("Item Categories")
        .c("supply")
        .f("item_category")
        .restrict(&[settings.system_roles.admin.as_str()])
        .children(crud("New"))
}

/// INV / Inventory
pub fn inv(settings: &Settings) -> MenuItem {
    MenuItem::root().children([
        facilities().c("org"),
        MenuItem::new("Warehouse Stock").c("inv").f("inv_item").children([
            MenuItem::new("Search").f("inv_item").m("search"),
            MenuItem::new("Stock Count").f("adj"),
            MenuItem::new("Import").f("inv_item").m("import").p("create"),
        ]),
        MenuItem::new("Reports").c("inv").f("inv_item").children([
            MenuItem::new("Warehouse Stock").f("inv_item").m("report"),
            MenuItem::new("Expiration Report")
                .c("inv")
                .f("track_item")
                .m("search")
                .var("report", "exp"),
        ]),
        MenuItem::new("Items").c("supply").f("item").children([
            MenuItem::new("New").m("create"),
            MenuItem::new("List All"),
            MenuItem::new("Search").m("search"),
            MenuItem::new("Report").m("report"),
            MenuItem::new("Import").f("catalog_item").m("import").p("create"),
        ]),
        item_categories(settings),
        MenuItem::new("Requests").c("req").f("req").children([
            MenuItem::new("New").m("create"),
            MenuItem::new("List All"),
            MenuItem::new("Requested Items").f("req_item"),
        ]),
    ])
}

/// ORG / Organization Registry
pub fn org() -> MenuItem {
    MenuItem::root().c("org").children([
        facilities(),
        MenuItem::new("Organizations").f("organisation").children([
            MenuItem::new("Add Organization").m("create"),
            MenuItem::new("List All"),
            MenuItem::new("Search").m("search"),
            MenuItem::new("Import").m("import"),
        ]),
        MenuItem::new("Facility Types")
            .f("facility_type")
            .children(crud("New")),
        MenuItem::new("Organization Types")
            .f("organisation_type")
            .children(crud("New")),
    ])
}

/// REQ / Request Management
pub fn req(settings: &Settings) -> MenuItem {
    MenuItem::root().c("req").children([
        MenuItem::new("Requests").f("req").children([
            MenuItem::new("New").m("create"),
            MenuItem::new("List All"),
            MenuItem::new("Search").m("search"),
            MenuItem::new("Map").m("map"),
            MenuItem::new("Report").m("report"),
            MenuItem::new("List All Requested Items").f("req_item"),
            MenuItem::new("List All Requested Skills")
                .f("req_skill")
                .check(|ctx| ctx.settings().req_types().iter().any(|t| t == "People")),
        ]),
        MenuItem::new("Items").c("supply").f("item").children([
            MenuItem::new("New").m("create"),
            MenuItem::new("List All"),
            MenuItem::new("Search").m("search"),
            MenuItem::new("Report").m("report"),
            MenuItem::new("Import").m("import").p("create"),
        ]),
        item_categories(settings),
    ])
}

/// DEPLOY / Deployments
pub fn deploy() -> MenuItem {
    MenuItem::root().c("deploy").children([
        MenuItem::new("Deployments")
            .f("deployment")
            .m("summary")
            .child(MenuItem::new("New Deployment").m("create")),
        MenuItem::new("Alerts").f("alert").children(crud("New Alert")),
        MenuItem::new("Members")
            .f("human_resource")
            .m("summary")
            .children([
                MenuItem::new("Add Member").m("create"),
                MenuItem::new("Import Members").f("person").m("import").p("create"),
            ]),
    ])
}
