pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# SPIKETRACE SEEDER CONFIGURATION
# =============================================================================
# Describes the synthetic world the seeder generates: which services and
# regions exist, when each scenario spikes, which deployment caused it, and
# where the resulting batch is written.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/spiketrace/config.yml
#   3. /etc/spiketrace/config.yml
#
# Values may reference environment variables with the $env{...} syntax
# (dollar sign, "env", variable name in braces). Unset variables are an error.

# =============================================================================
# GENERATOR
# =============================================================================
generator:
  # Fix the seed to make runs reproducible. Omit to draw a fresh one per run
  # (the drawn seed is logged).
  # seed: 42

  # The scenario anchor (offset 0) sits this many minutes from "now", so the
  # spikes land inside default dashboard ranges such as "Last 1 hour".
  base_offset_minutes: -60

# =============================================================================
# CARBON MODEL
# =============================================================================
carbon:
  # One compute unit at full load
  watts_at_full_load: 50.0
  # Used for regions missing from the table below
  default_intensity_g_per_kwh: 450.0
  grid_intensity_g_per_kwh:
    us-central1: 400.0
    europe-west1: 250.0

# =============================================================================
# SERVICES AND REGIONS
# =============================================================================
# Ranges are [min, max) and sampled uniformly. The spike profile is used
# whenever the service is inside a scenario's spike window.
services:
  - name: checkout
    average_order_value_usd: 85.0
    spike:
      cpu_pct: [80.0, 95.0]
      memory_pct: [70.0, 90.0]
      requests_per_min: [400.0, 700.0]

  - name: payments
    average_order_value_usd: 95.0
    spike:
      cpu_pct: [75.0, 92.0]
      memory_pct: [68.0, 88.0]
      requests_per_min: [350.0, 650.0]

  - name: inventory
    average_order_value_usd: 60.0
    spike:
      cpu_pct: [70.0, 88.0]
      memory_pct: [65.0, 85.0]
      requests_per_min: [300.0, 550.0]

regions:
  - us-central1
  - europe-west1

# =============================================================================
# SCENARIOS
# =============================================================================
# One spike per service/region pair. Offsets are minutes relative to the
# anchor; the window is [start, start + duration). Deployment lead_minutes is
# measured back from the spike start. Pairs without a scenario never spike.
scenarios:
  - service: checkout
    region: us-central1
    primary: true
    start_offset_minutes: 0
    duration_minutes: 60
    bad_deployment:
      id: deploy-checkout-bad
      version: v2.3.0
      lead_minutes: 5
    good_deployment:
      id: deploy-checkout-good
      version: v2.2.5
      lead_minutes: 240
    log:
      error_type: UpstreamTimeout
      error_message: Checkout request failed, retrying
      ok_message: Checkout request succeeded

  - service: inventory
    region: europe-west1
    start_offset_minutes: -60
    duration_minutes: 45
    bad_deployment:
      id: deploy-inventory-bad
      version: v1.4.0
      lead_minutes: 10
    good_deployment:
      id: deploy-inventory-good
      version: v1.3.5
      lead_minutes: 120
    log:
      error_type: DbLockTimeout
      error_message: Inventory update failed due to DB lock timeout, retrying
      ok_message: Inventory update succeeded

  - service: payments
    region: europe-west1
    start_offset_minutes: 30
    duration_minutes: 45
    bad_deployment:
      id: deploy-payments-bad
      version: v3.1.0
      lead_minutes: 5
    good_deployment:
      id: deploy-payments-good
      version: v3.0.4
      lead_minutes: 330
    log:
      error_type: ThirdPartyGatewayError
      error_message: Payment authorization failed due to gateway error, retrying
      ok_message: Payment authorization succeeded

# =============================================================================
# RECORD GENERATORS
# =============================================================================
metrics:
  start_offset_minutes: -120
  end_offset_minutes: 120
  step_minutes: 5
  baseline:
    cpu_pct: [30.0, 60.0]
    memory_pct: [40.0, 70.0]
    requests_per_min: [200.0, 400.0]

logs:
  # Timeline for the primary scenario
  primary:
    start_offset_minutes: -60
    end_offset_minutes: 120
    step_minutes: 2
    burst_size: 5
    error_latency_ms: [800.0, 1500.0]
    ok_latency_ms: [120.0, 250.0]
  # Timeline for every other scenario
  secondary:
    start_offset_minutes: -120
    end_offset_minutes: 120
    step_minutes: 5
    burst_size: 3
    error_latency_ms: [700.0, 1400.0]
    ok_latency_ms: [100.0, 260.0]

deployments:
  history_days: 14
  status_weights:
    succeeded: 6
    failed: 2
    rolled_back: 1

incidents:
  random_count: 40
  lookback_days: 90
  embedding_dims: 384
  curated_cpu_pct: 60.0
  excess_cpu_pct: [10.0, 60.0]
  duration_minutes: [15.0, 180.0]
  default_order_value_usd: 80.0

# =============================================================================
# SINK
# =============================================================================
# Local DuckDB file, one table per collection.
sink:
  type: duckdb
  path: ~/.local/share/spiketrace/spiketrace.duckdb

# Elasticsearch bulk API instead:
# sink:
#   type: elasticsearch
#   endpoint: https://my-deployment.es.us-central1.gcp.cloud.es.io
#   # or, for Elastic Cloud, the deployment's Cloud ID (takes precedence):
#   # cloud_id: my-deployment:<base64 id from the cloud console>
#   api_key: <read from the environment with the $env{...} syntax>
#   index_prefix: spiketrace
#   chunk_size: 500
"#
    .to_string()
}
