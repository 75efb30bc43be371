use std::sync::Arc;

use clap::Parser;
use exchange_directory::{Config, Directory, DirectoryServicer};
use matching_proto::MatchingServiceServer;

#[derive(Debug, Parser)]
#[command(author, version, about = "The exchange directory")]
struct Args {
    /// Address the directory's gRPC server binds to.
    #[arg(long, env = "BIND_ADDRESS")]
    bind_address: Option<std::net::SocketAddr>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let args = Args::parse();

    let body = async {
        tracing_subscriber::fmt::fmt()
            .with_file(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();

        let config = Config::load_from_env().with_overrides(args.bind_address);

        run(config).await.map_err(|err| Box::new(err) as Box<_>)
    };

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed building the Runtime")
        .block_on(body)
}

async fn run(config: Config) -> Result<(), tonic::transport::Error> {
    let directory = Arc::new(Directory::new(
        config.client_authentication_key().to_owned(),
        config.engine_credentials().to_owned(),
    ));

    let servicer = DirectoryServicer::new(directory);

    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(matching_proto::matching::FILE_DESCRIPTOR_SET)
        .build()
        .expect("failed to build reflection service");

    tracing::info!(addr = %config.bind_address(), "starting exchange directory");

    tonic::transport::Server::builder()
        .add_service(reflection)
        .add_service(MatchingServiceServer::new(servicer))
        .serve(config.bind_address())
        .await
}
