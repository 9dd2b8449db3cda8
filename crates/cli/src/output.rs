//! Terminal rendering of a cart snapshot.

use cartsync_client::{CartSnapshot, SyncPhase};

const NAME_WIDTH: usize = 32;

/// Print the cart as a table followed by its totals.
#[allow(clippy::print_stdout)]
pub fn print_cart(snapshot: &CartSnapshot) {
    println!("Cart ({})", phase_label(snapshot.phase));

    if snapshot.cart.is_empty() {
        println!("  (empty)");
    } else {
        println!(
            "  {:<24} {:<width$} {:>5} {:>10} {:>10}",
            "PRODUCT",
            "NAME",
            "QTY",
            "PRICE",
            "TOTAL",
            width = NAME_WIDTH,
        );
        for line in snapshot.cart.lines() {
            println!(
                "  {:<24} {:<width$} {:>5} {:>10} {:>10}",
                line.product_ref.as_str(),
                truncate(&line.name, NAME_WIDTH),
                line.quantity.get(),
                line.unit_price.round_dp(2),
                line.line_total().round_dp(2),
                width = NAME_WIDTH,
            );
        }
    }

    println!();
    println!("  Items:    {}", snapshot.item_count);
    println!("  Subtotal: {}", snapshot.subtotal.round_dp(2));

    if !snapshot.dropped.is_empty() {
        let refs: Vec<&str> = snapshot.dropped.iter().map(|r| r.as_str()).collect();
        println!("  Not merged (refused by the server): {}", refs.join(", "));
    }
}

const fn phase_label(phase: SyncPhase) -> &'static str {
    match phase {
        SyncPhase::Anonymous => "guest",
        SyncPhase::Merging => "merging",
        SyncPhase::Authenticated => "customer",
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
