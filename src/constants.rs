pub const GRID_WIDTH: usize = 700;
pub const GRID_HEIGHT: usize = 765;
pub const FRAME_COUNT: usize = 25;
pub const FRAME_LEN: usize = GRID_WIDTH * GRID_HEIGHT;
pub const FRAME_STEP_MINUTES: i64 = 5;

// Polar stereographic, pole at 90N, central meridian 0, true scale at 60N.
pub const PROJ_SEMI_MAJOR_KM: f64 = 6378.14;
pub const PROJ_SEMI_MINOR_KM: f64 = 6356.75;
pub const PROJ_LAT_TRUE_SCALE_DEG: f64 = 60.0;
pub const PROJ_CENTRAL_MERIDIAN_DEG: f64 = 0.0;

// Fitted against the producer's pixel grid; keep at full precision.
pub const PROJ_SCALE_HORIZONTAL: f64 = 1.000003457069397;
pub const PROJ_SCALE_VERTICAL: f64 = -1.000004768371582;
pub const PROJ_OFFSET_VERTICAL: f64 = 3649.98193359375;

pub const EARTH_MEAN_RADIUS_METERS: f64 = 6_371_000.0;

pub const KNMI_DATASET_PREFIX: &str = "RAD_NL25_PCP_FM_";
pub const KNMI_DATASET_SUFFIX: &str = ".h5";
pub const KNMI_FILENAME_TIME_FORMAT: &str = "%Y%m%d%H%M";
pub const KNMI_PUBLISH_DELAY_MINUTES: i64 = 5;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9292";
pub const DEFAULT_KNMI_API_BASE_URL: &str =
    "https://api.dataplatform.knmi.nl/open-data/v1/datasets/radar_forecast/versions/1.0";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 300;
pub const DEFAULT_PENDING_RETRY_SECONDS: u64 = 30;
pub const DEFAULT_MAX_ROUTE_NODES: usize = 2000;
pub const MAX_PENDING_ATTEMPTS: u32 = 10;

pub const HDF5_FRAME_GROUP_PREFIX: &str = "image";
pub const HDF5_FRAME_DATASET: &str = "image_data";

pub const KNMI_NOTIFY_BROKER_URL: &str = "wss://mqtt.dataplatform.knmi.nl:443/mqtt";
pub const KNMI_NOTIFY_BROKER_PORT: u16 = 443;
pub const KNMI_NOTIFY_USERNAME: &str = "token";
pub const KNMI_NOTIFY_TOPIC: &str = "dataplatform/file/v1/radar_forecast/1.0/created";
pub const KNMI_NOTIFY_KEEP_ALIVE_SECONDS: u64 = 60;
pub const KNMI_NOTIFY_RECONNECT_DELAY_SECONDS: u64 = 5;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
