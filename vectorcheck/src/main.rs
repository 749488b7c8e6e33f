use vectorcheck::DecoderRegistry;

fn main() {
    let code = match vectorcheck::run(DecoderRegistry::builtin()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
