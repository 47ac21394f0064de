use crossterm::style::Stylize;

pub fn ok(message: &str) {
    println!("{} {}", "[OK]".green().bold(), message);
}

pub fn info(message: &str) {
    println!("{} {}", "[INFO]".cyan().bold(), message);
}

pub fn warn(message: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}

pub fn rule() {
    println!("{}", "═".repeat(50));
}
