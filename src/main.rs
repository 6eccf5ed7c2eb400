// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use clap::{Parser, Subcommand};
use cluster_inventory::config::{ControllerConfig, ServerArgs};
use cluster_inventory::fleet::Fleet;
use cluster_inventory::{crd, init_tracing, run};
use shadow_rs::shadow;
use std::sync::Arc;
use tracing::info;

shadow!(build);

#[derive(Parser)]
#[command(name = "cluster-inventory")]
#[command(about = "Cluster admission and health controller", long_about = None)]
#[command(version = build::PKG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Output CRDs in YAML
    Crd {
        /// Optional output path. If not set, the output will be written to stdout.
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Run the controller
    Server(ServerArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crd { file } => crd(file).await?,
        Commands::Server(args) => {
            init_tracing();
            info!(
                version = build::PKG_VERSION,
                commit = build::SHORT_COMMIT,
                built = build::BUILD_TIME,
                "starting cluster-inventory"
            );

            let config = ControllerConfig::try_from(args)?;
            let fleet = Arc::new(Fleet::new(config.health.clone()));
            run(config, fleet).await?;
        }
    }

    Ok(())
}
