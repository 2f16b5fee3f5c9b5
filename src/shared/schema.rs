diesel::table! {
    tickets (id) {
        id -> Uuid,
        owner_id -> Text,
        owner_email -> Text,
        kind -> Text,
        category -> Text,
        severity -> Text,
        status -> Text,
        subject -> Text,
        body -> Text,
        steps_to_reproduce -> Nullable<Text>,
        expected_behavior -> Nullable<Text>,
        actual_behavior -> Nullable<Text>,
        system_info -> Nullable<Jsonb>,
        assigned_to -> Nullable<Text>,
        admin_notes -> Nullable<Text>,
        external_reference -> Nullable<Text>,
        version -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    ticket_responses (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        responder_id -> Text,
        message -> Text,
        is_internal -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(ticket_responses -> tickets (ticket_id));

diesel::allow_tables_to_appear_in_same_query!(tickets, ticket_responses);
