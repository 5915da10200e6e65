pub mod config;
pub mod delete;
pub mod instances;
pub mod serve;
pub mod show;
pub mod workflows;

pub use config::ConfigCommand;
pub use delete::DeleteCommand;
pub use instances::InstancesCommand;
pub use serve::ServeCommand;
pub use show::ShowCommand;
pub use workflows::WorkflowsCommand;

pub fn show_how_to_start() {
    println!("🧩 Pipulate - Step-based workflows with resumable state");
    println!();
    println!("To get started:");
    println!("  🚀 pipulate serve              # Run the web interface");
    println!("  📋 pipulate workflows          # List available workflows");
    println!("  🗂️  pipulate instances <app>    # List saved instances");
    println!("  🔍 pipulate show <key>         # Print an instance's state");
    println!();
    println!("💡 Start with 'pipulate serve' and open the printed address");
}
