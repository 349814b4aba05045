/// Bullet Tracer - Shows the flow through Lexer → Parser → Pretty Printer
///
/// Usage: cargo run --bin trace_bullet '<bullet text>'
use outline_dsl::{parse_bullet, pretty_print, Lexer};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() {
        eprintln!("Usage: cargo run --bin trace_bullet '<bullet text>'");
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --bin trace_bullet 'km: {{Distance(from: #[home], to: #[hotel])}}'");
        std::process::exit(1);
    }

    let source = args.join(" ");

    println!("╔═══════════════════════════════════════════════════════════════");
    println!("║ BULLET PARSER TRACER");
    println!("╚═══════════════════════════════════════════════════════════════\n");

    println!("📝 INPUT:");
    println!("{}", source);
    println!();

    println!("🔍 TOKENS:");
    println!("─────────────────────────────────────────────────────────────");
    for token in Lexer::new(&source).tokenize() {
        println!(
            "  {:>4}..{:<4} {}",
            token.span.start, token.span.end, token.kind
        );
    }
    println!("  (literal text outside {{…}} is tokenized only for display)");
    println!();

    println!("🌳 AST:");
    println!("─────────────────────────────────────────────────────────────");
    let bullet = match parse_bullet(&source) {
        Ok(bullet) => bullet,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    match serde_json::to_string_pretty(&bullet) {
        Ok(json) => println!("{}", json),
        Err(e) => println!("{:#?} (json failed: {})", bullet, e),
    }
    println!();

    println!("🔗 REFERENCED IDS:");
    println!("─────────────────────────────────────────────────────────────");
    let ids = bullet.referenced_ids();
    if ids.is_empty() {
        println!("  (none)");
    }
    for id in ids {
        println!("  #[{}]", id);
    }
    println!("  constant: {}", bullet.is_constant());
    println!();

    println!("✨ PRETTY PRINTED:");
    println!("─────────────────────────────────────────────────────────────");
    println!("{}", pretty_print(&bullet));
}
