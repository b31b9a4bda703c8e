pub mod change_pipeline;
