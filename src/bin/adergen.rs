use adergen::backend::CodeGenerator;
use adergen::config::GeneratorConfig;
use adergen::io::manifest::ManifestGenerator;
use adergen::seissol::generate_kernel_library;
use clap::Parser;
use log::info;

fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GeneratorConfig::parse();
    info!(
        "Generating order {} kernels for {} with the {} generator",
        config.order, config.arch, config.generator
    );
    if config.number_of_mechanisms > 0 {
        info!(
            "Ignoring {} relaxation mechanisms, the elastic solver has none",
            config.number_of_mechanisms
        );
    }

    let library = generate_kernel_library(&config)?;
    ManifestGenerator.generate(&library, &config.output_dir)?;
    Ok(())
}
