//! Terminal output.

use burrow_core::{ConnectionProfile, NodeId, ObjectBrowser, ResultEnvelope, TableDetails};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

fn table(header: impl Into<comfy_table::Row>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        ""
    }
}

pub fn print_envelope(envelope: &ResultEnvelope) {
    match envelope {
        ResultEnvelope::Query { columns, rows, message } => {
            let mut out = table(columns.iter().map(String::as_str));
            for row in rows {
                out.add_row(row.values().iter().map(ToString::to_string));
            }
            println!("{out}");
            println!("({message})");
        }
        ResultEnvelope::Command { message, .. } => println!("{message}"),
    }
}

pub fn print_profiles(profiles: &[ConnectionProfile]) {
    if profiles.is_empty() {
        println!("no saved profiles");
        return;
    }
    let mut out = table(["Name", "URL", "SSL", "Connect timeout"]);
    for profile in profiles {
        out.add_row([
            profile.name.clone(),
            profile.display_url(),
            profile.ssl_mode.as_str().to_string(),
            format!("{}s", profile.options.connect_timeout_secs),
        ]);
    }
    println!("{out}");
}

/// Children of an expanded node, containers marked with a trailing `/`.
pub fn print_children(browser: &ObjectBrowser, id: NodeId) {
    let children = browser.children(id);
    if children.is_empty() {
        println!("(empty)");
        return;
    }
    for child in children {
        if let Some(node) = browser.node(*child) {
            let marker = if node.kind.is_container() { "/" } else { "" };
            println!("{}{marker}", node.label);
        }
    }
}

pub fn print_table_details(details: &TableDetails) {
    println!("{} in {}", details.object.qualified_name(), details.database);

    let mut columns = table(["Column", "Type", "Nullable", "Default", "PK"]);
    for column in &details.columns {
        columns.add_row([
            column.name.as_str(),
            column.data_type.as_str(),
            yes_no(column.nullable),
            column.default_expr.as_str(),
            yes_no(column.primary_key),
        ]);
    }
    println!("{columns}");

    if !details.indexes.is_empty() {
        let mut indexes = table(["Index", "Kind", "Columns", "Unique"]);
        for index in &details.indexes {
            indexes.add_row([
                index.index_name.as_str(),
                index.kind.as_str(),
                index.columns_text.as_str(),
                index.uniqueness_marker.as_str(),
            ]);
        }
        println!("{indexes}");
    }

    if !details.foreign_keys.is_empty() {
        let mut fks = table(["Foreign key", "Column", "References"]);
        for fk in &details.foreign_keys {
            fks.add_row([fk.fk_name.clone(), fk.local_column.clone(), fk.reference_text()]);
        }
        println!("{fks}");
    }

    println!("\n{}\n", details.ddl);
    print_envelope(&details.preview);
}
