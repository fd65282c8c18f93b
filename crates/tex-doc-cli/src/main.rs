use std::process;

fn main() {
    match tex_doc_cli::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("tex-doc error: {err}");
            process::exit(1);
        }
    }
}
