//! JSON response models served by the proxy.

use serde::Serialize;

/// Live location record for a single vehicle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusLocation {
    pub lat: f64,
    pub lng: f64,
    pub heading: Option<f64>,
    pub next_stop: Option<String>,
    pub previous_stop: Option<String>,
    pub last_updated: Option<String>,
    pub route_id: Option<i64>,
    pub route_no: Option<String>,
    pub vehicle_id: i64,
    pub vehicle_no: Option<String>,
    pub trip_status: Option<String>,
    pub eta: Option<String>,
}

impl BusLocation {
    /// Static fallback returned when the upstream answers 403, so the demo
    /// stays usable without valid upstream credentials.
    pub fn mock(vehicle_id: i64) -> Self {
        BusLocation {
            lat: 12.963484,
            lng: 77.580299,
            heading: Some(275.0),
            next_stop: Some("KR Market (Towards Chamarajapete)".into()),
            previous_stop: Some("Corporation (Towards KR Market )".into()),
            last_updated: Some("28-11-2025 06:23:22".into()),
            route_id: Some(2965),
            route_no: Some("15-G".into()),
            vehicle_id,
            vehicle_no: Some("KA57F2965".into()),
            trip_status: Some("Running (MOCK - upstream 403)".into()),
            eta: Some("06:25".into()),
        }
    }
}

/// One stop on a route, in travel order.
#[derive(Debug, Clone, Serialize)]
pub struct RouteStop {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub sequence: u32,
}

/// Ordered stop list for one route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopsResponse {
    pub route_id: i64,
    pub route_no: String,
    pub direction: Option<String>,
    pub stops: Vec<RouteStop>,
}

/// Hard-coded stop list for route 15-G (route id 1672).
pub fn route_15g_stops() -> StopsResponse {
    let stops_data: [(&str, f64, f64); 23] = [
        ("Kempegowda Bus Station", 12.97751, 77.57141),
        ("Maharani College", 12.97703, 77.58580),
        ("KR Circle", 12.97386, 77.58661),
        ("St Marthas Hospital", 12.96945, 77.58716),
        ("Corporation", 12.96701, 77.58822),
        ("Town Hall", 12.96355, 77.58375),
        ("KR Market", 12.96368, 77.57742),
        ("Makkala Koota", 12.95664, 77.57383),
        ("Mahila Seva Samaja", 12.95362, 77.57379),
        ("National College", 12.94942, 77.57379),
        ("Basavanagudi Police Station", 12.94168, 77.57396),
        ("Nettakallappa Circle", 12.93917, 77.57175),
        ("Nagasandra Circle", 12.93697, 77.57208),
        ("Tata Silk Farm", 12.93589, 77.57384),
        ("MM Industries", 12.92950, 77.57372),
        ("Shastri Bakery", 12.92363, 77.57367),
        ("Monotype Corporation", 12.92154, 77.57104),
        ("Kaveri Nagara", 12.91986, 77.56931),
        ("Yarab Nagara", 12.91657, 77.56914),
        ("Kadirenahalli Cross", 12.91364, 77.56727),
        ("Dayananda Sagar College", 12.90948, 77.56553),
        ("Water Tank", 12.90847, 77.56169),
        ("Kumaraswamy Layout 2nd Stage", 12.90584, 77.55814),
    ];

    let stops = stops_data
        .iter()
        .enumerate()
        .map(|(i, (name, lat, lng))| RouteStop {
            name: (*name).into(),
            lat: *lat,
            lng: *lng,
            sequence: i as u32 + 1,
        })
        .collect();

    StopsResponse {
        route_id: 1672,
        route_no: "15-G".into(),
        direction: Some("KBS -> Kumaraswamy Layout 2nd Stage".into()),
        stops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_carries_requested_vehicle_id() {
        let mock = BusLocation::mock(4242);
        assert_eq!(mock.vehicle_id, 4242);
        assert_eq!(mock.route_no.as_deref(), Some("15-G"));
        assert!(mock.trip_status.as_deref().unwrap().contains("MOCK"));
    }

    #[test]
    fn test_mock_serializes_camel_case() {
        let json = serde_json::to_value(BusLocation::mock(1)).unwrap();
        assert!(json.get("vehicleId").is_some());
        assert!(json.get("nextStop").is_some());
        assert!(json.get("vehicle_id").is_none());
    }

    #[test]
    fn test_15g_stop_list_is_ordered() {
        let resp = route_15g_stops();
        assert_eq!(resp.route_id, 1672);
        assert_eq!(resp.stops.len(), 23);
        assert_eq!(resp.stops[0].sequence, 1);
        assert_eq!(resp.stops[22].sequence, 23);
        assert_eq!(resp.stops[0].name, "Kempegowda Bus Station");
    }
}
