fn main() {
    agri_pipeline::cli::run();
}
