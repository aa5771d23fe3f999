use std::path::PathBuf;

use tracing::{debug, warn};

use crate::app::endpoints::{dispatch, Endpoint};
use crate::app::error::AppError;
use crate::app::fitness::FitnessFunction;
use crate::app::models::Message;
use crate::app::properties::load_properties;

type Handler = fn(&PropertiesEndpoint, &Message, &str) -> Result<Message, AppError>;

const ROUTES: &[(&str, Handler)] = &[(
    "/properties/get_mate_properties",
    PropertiesEndpoint::get_properties as Handler,
)];

/// Serves the driver's key-value settings file under `/properties`.
pub struct PropertiesEndpoint {
    path: PathBuf,
}

impl PropertiesEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn get_properties(&self, _request: &Message, trace_id: &str) -> Result<Message, AppError> {
        let properties = load_properties(&self.path);

        let mut response = Message::new("/properties");
        for (key, value) in properties {
            debug!(trace_id, key = %key, value = %value, "property");
            if key == "fitness_function" {
                if let Err(err) = value.parse::<FitnessFunction>() {
                    warn!(trace_id, error = %err, "properties name an unsupported fitness function");
                }
            }
            response = response.with_parameter(key, value);
        }
        Ok(response)
    }
}

impl Endpoint for PropertiesEndpoint {
    fn handle(&self, request: &Message, trace_id: &str) -> Result<Message, AppError> {
        dispatch(self, ROUTES, request, trace_id)
    }
}
