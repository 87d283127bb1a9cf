fn main() -> Result<(), Box<dyn std::error::Error>> {
    gemchat::cli::main()
}
